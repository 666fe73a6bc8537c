mod session;

pub use session::RequestSession;
