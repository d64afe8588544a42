//! Embassy async tasks
//!
//! Fast motion timing runs in interrupt handlers (see `irq`); these tasks
//! cover the slow paths and talk to the handlers through `channels`.

pub mod inputs;
pub mod motion;
pub mod supervisor;
pub mod ticks;

pub use inputs::input_scan_task;
pub use motion::motion_task;
pub use supervisor::supervisor_task;
pub use ticks::{debounce_task, delay_task};
