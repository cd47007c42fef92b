/// Middleware modules for the API server
///
/// JWT authentication lives in `app::jwt_auth_layer`; this module holds the
/// tower layers applied to every response.

pub mod security;
