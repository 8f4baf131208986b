//! Interrupt subsystem: controller contract, software controller and
//! dispatch table.

mod controller;
mod dispatch;
mod soft_pic;

pub use controller::InterruptController;
pub use dispatch::{InterruptHandler, InterruptRegistration, InterruptTable, SpuriousPolicy};
pub use soft_pic::SoftPic;
