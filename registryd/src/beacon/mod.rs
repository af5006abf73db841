pub mod prober;
pub mod report;

pub use prober::{Prober, UdpProber};
pub use report::{decode_report, BeaconError, Report};
