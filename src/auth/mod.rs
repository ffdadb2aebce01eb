pub mod cleanup;
pub mod extractors;
pub mod gate;
pub mod jwt;
pub mod password;
pub mod refresh_tokens;
pub mod services;
pub mod sessions;
pub mod tokens;

#[cfg(test)]
pub mod test_support;
