//! Frame loop integration tests
//!
//! Drive whole frames through the engine on a headless device: provisioning,
//! late texture arrival, animation feeding world matrices, and the skybox pass.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::animation::KeyFrame;
use crate::assets::image_loader::solid_color;
use crate::assets::scene_asset::{
    AccessorDesc, AccessorType, BufferViewDesc, MaterialDesc, MaterialExtensions, MeshDesc, NodeDesc, PrimitiveDesc,
    SceneAssetDesc, SpecularGlossinessDesc, TextureDesc, TextureInfo,
};
use crate::core::config::{EngineConfig, ShaderConfig};
use crate::foundation::math::{Transform, Vec3};
use crate::input::MotionIntent;
use crate::render::device::{BufferTarget, ComponentType, DrawMode, Sampler, TextureKind};
use crate::render::headless::{DeviceCommand, HeadlessDevice};
use crate::render::{Light, ShaderClass, Texture, TextureState};
use crate::Engine;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine() -> Engine {
        let shaders = ShaderConfig::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("shaders"));
        Engine::new(EngineConfig::new().with_shaders(shaders)).unwrap()
    }

    fn accessor(buffer_view: usize, component_type: ComponentType, kind: AccessorType) -> AccessorDesc {
        AccessorDesc {
            buffer_view,
            component_type,
            kind,
            count: 3,
            byte_offset: 0,
            byte_stride: 0,
            normalized: false,
        }
    }

    /// A bobbing body with a wheel attached, both drawing the same triangle
    fn bobbing_asset() -> SceneAssetDesc {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let normals: [f32; 9] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let indices: [u16; 3] = [0, 1, 2];
        let mut attributes = BTreeMap::new();
        attributes.insert("POSITION".to_string(), 0);
        attributes.insert("NORMAL".to_string(), 1);

        SceneAssetDesc {
            extensions_required: Vec::new(),
            buffer_views: vec![
                BufferViewDesc { target: BufferTarget::Vertex, data: bytemuck::cast_slice(&positions).to_vec() },
                BufferViewDesc { target: BufferTarget::Vertex, data: bytemuck::cast_slice(&normals).to_vec() },
                BufferViewDesc { target: BufferTarget::Index, data: bytemuck::cast_slice(&indices).to_vec() },
            ],
            accessors: vec![
                accessor(0, ComponentType::Float, AccessorType::Vec3),
                accessor(1, ComponentType::Float, AccessorType::Vec3),
                accessor(2, ComponentType::UnsignedShort, AccessorType::Scalar),
            ],
            textures: vec![TextureDesc { uri: "paint.png".to_string(), sampler: Sampler::default() }],
            materials: vec![MaterialDesc {
                name: "paint".to_string(),
                extensions: MaterialExtensions {
                    specular_glossiness: Some(SpecularGlossinessDesc {
                        diffuse_texture: Some(TextureInfo { index: 0 }),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }],
            meshes: vec![MeshDesc {
                name: "triangle".to_string(),
                primitives: vec![PrimitiveDesc { attributes, indices: 2, material: Some(0), mode: DrawMode::Triangles }],
            }],
            nodes: vec![
                NodeDesc {
                    name: "body".to_string(),
                    mesh: Some(0),
                    children: vec![1],
                    animation: Some(vec![
                        KeyFrame::new(0.0, Transform::identity()),
                        KeyFrame::new(1000.0, Transform::from_translation(Vec3::new(0.0, 1.0, 0.0))),
                    ]),
                    ..Default::default()
                },
                NodeDesc {
                    name: "wheel".to_string(),
                    mesh: Some(0),
                    translation: Some([2.0, 0.0, 0.0]),
                    ..Default::default()
                },
            ],
            scene: vec![0],
        }
    }

    #[test]
    fn test_idle_animation_drives_world_matrices() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        let asset = engine.load_asset(None, "bobber", &bobbing_asset()).unwrap();
        engine.initialize(&mut device).unwrap();

        let body = engine.scene.child_by_name(asset.node, "body").unwrap();
        let wheel = engine.scene.child_by_name(body, "wheel").unwrap();
        let mut intent = MotionIntent::default();

        for expected in [0.25, 0.5, 0.75, 0.0] {
            let stats = engine.frame(&mut device, 250.0, &mut intent);
            assert_eq!(stats.nodes_updated, 3);
            assert_eq!(stats.draw_calls, 2);

            let body_world = engine.scene.world_matrix(body).unwrap();
            let wheel_world = engine.scene.world_matrix(wheel).unwrap();
            assert_relative_eq!(body_world[(1, 3)], expected, epsilon = 1e-4);
            assert_relative_eq!(wheel_world[(0, 3)], 2.0, epsilon = 1e-4);
            assert_relative_eq!(wheel_world[(1, 3)], expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_late_texture_binds_on_next_frame() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        let asset = engine.load_asset(None, "bobber", &bobbing_asset()).unwrap();
        engine.initialize(&mut device).unwrap();

        let mut intent = MotionIntent::default();
        let stats = engine.frame(&mut device, 16.0, &mut intent);
        assert_eq!(stats.draw_calls, 2);
        assert!(device.bound_texture(0).is_none());

        let mut loaders = asset.loaders;
        loaders.remove(0).complete(vec![solid_color(4, 4, [200, 40, 40, 255])]);

        let stats = engine.frame(&mut device, 16.0, &mut intent);
        assert_eq!(stats.resources_ready, 1);
        assert_eq!(stats.draw_calls, 2);
        assert!(device.bound_texture(0).is_some());
        assert!(device.commands().iter().any(|c| matches!(c, DeviceCommand::GenerateMipmaps(_))));
    }

    #[test]
    fn test_nodes_added_after_initialize_render_once_prepared() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        engine.initialize(&mut device).unwrap();

        engine.load_asset(None, "late", &bobbing_asset()).unwrap();
        let mut intent = MotionIntent::default();

        // The frame's prepare pass links and uploads before rendering
        let stats = engine.frame(&mut device, 16.0, &mut intent);
        assert!(stats.resources_ready > 0);
        assert_eq!(stats.draw_calls, 2);
    }

    #[test]
    fn test_lights_reach_the_material_program() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        engine.load_asset(None, "bobber", &bobbing_asset()).unwrap();
        engine.add_light(Light::point(Vec3::new(0.0, 5.0, 0.0)));
        engine.initialize(&mut device).unwrap();

        engine.frame(&mut device, 16.0, &mut MotionIntent::default());
        let names: Vec<&str> = device
            .commands()
            .iter()
            .filter_map(|command| match command {
                DeviceCommand::SetUniform { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert!(names.contains(&"uLights[0].type"));
        assert!(names.contains(&"uLights[0].position"));
        assert!(names.contains(&"uModelMatrix"));
    }

    #[test]
    fn test_skybox_draws_last_with_depth_writes_restored() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        engine.load_asset(None, "bobber", &bobbing_asset()).unwrap();
        let faces = (0..6).map(|_| solid_color(8, 8, [40, 80, 160, 255])).collect();
        engine
            .set_skybox(Texture::from_data("sky", TextureKind::CubeMap, Sampler::default(), faces))
            .unwrap();
        engine.initialize(&mut device).unwrap();

        let stats = engine.frame(&mut device, 16.0, &mut MotionIntent::default());
        assert_eq!(stats.draw_calls, 3);
        assert!(device.depth_writes_enabled());
        assert!(matches!(
            device.commands().iter().rev().find(|c| matches!(c, DeviceCommand::DrawElements { .. } | DeviceCommand::DrawArrays { .. })),
            Some(DeviceCommand::DrawArrays { count: 36, .. })
        ));
    }

    fn sky_texture() -> Texture {
        let faces = (0..6).map(|_| solid_color(8, 8, [40, 80, 160, 255])).collect();
        Texture::from_data("sky", TextureKind::CubeMap, Sampler::default(), faces)
    }

    #[test]
    fn test_skybox_set_after_initialize_draws() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        engine.initialize(&mut device).unwrap();
        engine.set_skybox(sky_texture()).unwrap();

        let mut intent = MotionIntent::default();
        let first = engine.frame(&mut device, 16.0, &mut intent);
        assert!(first.resources_ready > 0);
        assert_eq!(first.draw_calls, 1);

        let draws: usize = (0..4).map(|_| engine.frame(&mut device, 16.0, &mut intent).draw_calls).sum();
        assert_eq!(draws, 4);
    }

    #[test]
    fn test_asset_below_another_asset_is_drawn() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        let outer = engine.load_asset(None, "bobber", &bobbing_asset()).unwrap();
        let body = engine.scene.child_by_name(outer.node, "body").unwrap();
        engine.load_asset(Some(body), "rider", &bobbing_asset()).unwrap();
        engine.initialize(&mut device).unwrap();

        let stats = engine.frame(&mut device, 16.0, &mut MotionIntent::default());
        assert_eq!(stats.draw_calls, 4);
    }

    #[test]
    fn test_mirror_asset_reflects_skybox_on_unit_zero() {
        let mut engine = engine();
        let mut device = HeadlessDevice::new();
        engine
            .load_asset_with_class(None, "chrome", &bobbing_asset(), ShaderClass::Mirror)
            .unwrap();
        engine.set_skybox(sky_texture()).unwrap();
        engine.initialize(&mut device).unwrap();

        let stats = engine.frame(&mut device, 16.0, &mut MotionIntent::default());
        assert_eq!(stats.draw_calls, 3);

        let sky = match engine.skybox.as_ref().unwrap().texture().state() {
            TextureState::Uploaded(handle) => *handle,
            other => panic!("skybox texture not uploaded: {other:?}"),
        };
        let commands = device.commands();
        let first_draw = commands
            .iter()
            .position(|c| matches!(c, DeviceCommand::DrawElements { .. }))
            .unwrap();
        assert!(commands[..first_draw]
            .iter()
            .any(|c| *c == DeviceCommand::BindTexture { unit: 0, texture: sky }));
    }
}
