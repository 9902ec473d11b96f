//! Interception layer over the two client-side network primitives.
//!
//! Two structurally different APIs must expose identical routing semantics:
//!
//! - [`fetch`](crate::intercept::fetch): the future-shaped primitive, one
//!   call, one awaited [`http::Response`].
//! - [`xhr`](crate::intercept::xhr): the event/callback-shaped primitive,
//!   `open`/`send`, completion events, and synchronous-looking property
//!   reads over an operation whose real I/O never runs.
//!
//! Both interceptors make the same decision (a `pmtiles://` GET goes to the
//! dispatcher, everything else goes to the wrapped real implementation
//! untouched) and [`install`] wires them in as the process-wide ambient
//! primitives with an explicit install/uninstall lifecycle.

pub mod fetch;
pub mod install;
pub mod xhr;

pub use fetch::{FetchInterceptor, FetchRequest, HttpClient};
pub use install::{
    ambient_client, ambient_request_factory, new_request, register, EventedRequestFactory,
    Registration, SharedHttpClient,
};
pub use xhr::{EventCallback, EventKind, EventedRequest, ProgressEvent, XhrInterceptor};
