//! Cross-crate behaviour of the dispatcher, the registry and the platform,
//! exercised through the public API only.

mod dispatch {
    mod integration;
}
mod enqueue {
    mod integration;
}
mod mutation {
    mod integration;
}
mod recursion {
    mod integration;
}
mod registry {
    mod integration;
}
