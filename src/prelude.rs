pub use crate::executor::{JoinHandle, Task};
pub use crate::signal::{ObjectKind, SimObject};
pub use crate::sim_if::{sim_if, SimIf};
pub use crate::testbench::Clock;
pub use crate::trigger::Trigger;
pub use crate::utils;
pub use crate::{fail_test, pass_test, test_list};
pub use crate::{RstbResult, RstbTests, SimError, SimResult, TbConfig, Test, Val};
pub use futures::future::FutureExt;
#[cfg(feature = "vpi")]
pub use crate::run_with_vpi;
