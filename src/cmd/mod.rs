//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                  |
//! |-----------|---------------------------------------------------|
//! | `project` | `Init`                                            |
//! | `review`  | `Review`, `Complete`, `Pending`, `Show`, `Remind` |
//! | `stage`   | `Stage`                                           |
//! | `config`  | `Config`                                          |

pub mod config;
pub mod project;
pub mod review;
pub mod stage;

pub use config::cmd_config;
pub use project::cmd_init;
pub use review::{cmd_complete, cmd_pending, cmd_remind, cmd_review, cmd_show};
pub use stage::{cmd_stage_list, cmd_stage_run};
