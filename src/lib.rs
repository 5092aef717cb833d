//! OpenAPI from traffic - Build OpenAPI documentation for undocumented REST APIs.
//!
//! The library turns a recorded HTTP traffic capture and an independently discovered route
//! list into one OpenAPI 3 document. Nothing is ever dropped: every endpoint seen in
//! traffic or declared in a route list ends up in the output.
//!
//! # Architecture
//!
//! 1. [`capture`] - Reads HAR captures and filters them down to API traffic
//! 2. [`path_normalizer`] - Collapses concrete paths into templates (`/posts/{id}`)
//! 3. [`schema_inference`] - Infers request and response schemas from body samples
//! 4. [`security`] - Detects authentication schemes from request headers
//! 5. [`openapi_builder`] - Document model, operations and the capture ingestion pass
//! 6. [`static_routes`] - Converts discovered route lists into minimal operations
//! 7. [`reference_resolver`] - Repairs dangling `$ref` pointers
//! 8. [`merger`] - Merges partial documents, accumulator wins
//! 9. [`pipeline`] - Assembles the final document in a fixed merge order
//! 10. [`serializer`] - Reads and writes JSON and YAML
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_traffic::{
//!     capture::{CaptureConfig, CaptureDocument},
//!     openapi_builder::OpenApiBuilder,
//!     pipeline::build_final_spec,
//!     serializer::serialize_yaml,
//!     static_routes::StaticRouteAdapter,
//! };
//! use std::path::Path;
//!
//! let capture = CaptureDocument::from_file(Path::new("session.har")).unwrap();
//! let spec = OpenApiBuilder::from_capture(&capture, CaptureConfig::default());
//!
//! let routes = StaticRouteAdapter::load(Path::new("routes.json")).unwrap();
//! let static_paths = StaticRouteAdapter::adapt(&routes);
//!
//! let capture_value = spec.document.to_value().unwrap();
//! let merged = build_final_spec(&capture_value, &static_paths, None).unwrap();
//! println!("{}", serialize_yaml(&merged).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod capture;
pub mod cli;
pub mod error;
pub mod merger;
pub mod openapi_builder;
pub mod path_normalizer;
pub mod pipeline;
pub mod reference_resolver;
pub mod schema_inference;
pub mod security;
pub mod serializer;
pub mod static_routes;
