pub mod db;
pub mod hooks;
pub mod http;
