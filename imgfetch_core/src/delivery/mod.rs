pub mod dispatcher;
pub mod sink;

pub use dispatcher::{Delivery, DirectDispatcher, Dispatcher, EventLoop, EventLoopDispatcher};
pub use sink::CompletionSink;
