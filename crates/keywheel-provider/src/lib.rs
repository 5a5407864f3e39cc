//! Provider-side auth and call shaping: Google service-account OAuth for
//! Vertex AI, and the request shapes for the two Gemini-family paths.
//!
//! Shaping never performs the provider call itself; callers own the fetch.
//! The only network this crate touches is the OAuth token endpoint, behind
//! the [`vertex::TokenMinter`] seam.

pub mod shape;
pub mod upstream;
pub mod vertex;

pub use shape::{ShapedRequest, shape_generate};
pub use upstream::UpstreamError;
pub use vertex::{
    AuthError, JwtBearerMinter, ServiceAccountKey, TokenCache, TokenGrant, TokenMinter,
    VertexAuthenticator,
};
