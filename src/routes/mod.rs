/// Router Module Index
///
/// Splits the route table by access level so the session gate is applied
/// once, at the router layer, instead of being re-checked ad hoc inside
/// every handler.

/// Routes accessible to any client, anonymous or logged-in. Handlers that
/// personalize their payload do so through the optional session extractor.
pub mod public;

/// Routes behind the session gate. Requires a live session cookie.
pub mod authenticated;
