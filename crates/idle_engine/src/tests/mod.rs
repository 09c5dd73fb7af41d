//! Integration tests across the scene, asset and engine modules

mod frame_loop;
