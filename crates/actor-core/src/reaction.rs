//! The lifecycle hooks ("reactions") a plugin can participate in.

use bitflags::bitflags;

bitflags! {
    /// Which of a plugin's veto hooks the actor core should drive it
    /// through. A plugin that sets no bits still gets `activate`/
    /// `deactivate` called (it exists purely to hold state or wire
    /// subscriptions at startup) but none of the `handle_*` hooks.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Reactions: u8 {
        const INIT           = 0b0000_0001;
        const SHUTDOWN       = 0b0000_0010;
        const START          = 0b0000_0100;
        const SUBSCRIPTION   = 0b0000_1000;
        const UNSUBSCRIPTION = 0b0001_0000;
    }
}
