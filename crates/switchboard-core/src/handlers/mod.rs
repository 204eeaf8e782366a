//! Handler variants the router can hold.

pub mod forward;
pub mod lua_call;
pub mod native;

pub use self::forward::ForwardHandler;
pub use self::lua_call::LuaCallHandler;
pub use self::native::FnHandler;
