#![allow(dead_code)]

pub mod board_engine;

pub mod prelude {
    pub use super::board_engine::prelude::*;
}
