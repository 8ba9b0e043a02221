pub mod auth;
pub mod logging;
pub mod url;

#[cfg(test)]
pub mod test_utils;
