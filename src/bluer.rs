pub mod radio;

mod error;
