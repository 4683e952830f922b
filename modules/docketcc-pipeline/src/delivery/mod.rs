pub mod backend;
pub mod noop;
pub mod render;
pub mod resend;
pub mod worker;

pub use backend::{EmailSender, OutgoingEmail};
pub use noop::NoopSender;
pub use render::{render_digest, RenderedEmail};
pub use resend::ResendSender;
pub use worker::{DeliveryReport, DeliveryWorker};
