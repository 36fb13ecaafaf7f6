//! 协同核心：错误分类、运行状态门、任务槽、状态机引擎、监管器

pub mod error;
pub mod gate;
pub mod process;
pub mod supervisor;
pub mod task;

pub use error::CoordError;
pub use gate::{AutoFunctionSwitches, OpGate, OpState};
pub use process::{update_state_machine, StateMachineProcess};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use task::{Task, TaskCommand, TaskMonitor, TaskStatus};
