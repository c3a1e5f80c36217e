//! The built-in display modes.

mod all;
mod enterprise_ethernet;
mod fixed_wireless;
mod upgrade;

pub use all::AllMode;
pub use enterprise_ethernet::EnterpriseEthernetMode;
pub use fixed_wireless::FixedWirelessMode;
pub use upgrade::UpgradeMode;
