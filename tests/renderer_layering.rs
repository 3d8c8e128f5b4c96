//! Nested `groupBy` over a small renderer-shaped scene: two viewports, each
//! with a camera and two layered renderables.

use archetype_ecs::prelude::*;

struct ViewportTrait;
struct LayerTrait;

struct Viewport0;
struct Viewport1;
struct Layer0;
struct Layer1;
struct Camera;
struct Renderable;

impl Component for Viewport0 {
    fn trait_descriptor() -> Option<TraitDescriptor> {
        Some(TraitDescriptor::grouped::<ViewportTrait>(0))
    }
}
impl Component for Viewport1 {
    fn trait_descriptor() -> Option<TraitDescriptor> {
        Some(TraitDescriptor::grouped::<ViewportTrait>(1))
    }
}
impl Component for Layer0 {
    fn trait_descriptor() -> Option<TraitDescriptor> {
        Some(TraitDescriptor::grouped::<LayerTrait>(0))
    }
}
impl Component for Layer1 {
    fn trait_descriptor() -> Option<TraitDescriptor> {
        Some(TraitDescriptor::grouped::<LayerTrait>(1))
    }
}
impl_component!(Camera, Renderable);

#[test]
fn nested_group_by_yields_ascending_keys_and_correct_membership() {
    let mut world = World::new();

    let camera0 = world.create_entity((Camera, Viewport0));
    let r00 = world.create_entity((Renderable, Viewport0, Layer0));
    let r01 = world.create_entity((Renderable, Viewport0, Layer1));
    let camera1 = world.create_entity((Camera, Viewport1));
    let r10 = world.create_entity((Renderable, Viewport1, Layer0));
    let r11 = world.create_entity((Renderable, Viewport1, Layer1));

    let viewport_groups = group_by_database::<ViewportTrait>(&world);
    assert_eq!(viewport_groups.len(), 2);
    assert_eq!(viewport_groups[0].key, 0);
    assert_eq!(viewport_groups[1].key, 1);

    let expected_cameras = [camera0, camera1];
    let expected_renderables = [[r00, r01], [r10, r11]];

    for (group, (&expected_camera, expected_layer_pair)) in
        viewport_groups.iter().zip(expected_cameras.iter().zip(expected_renderables.iter()))
    {
        let camera_query = group.query::<(Camera,)>();
        let cameras: Vec<EntityId> = camera_query.iter().map(|e| e.id()).collect();
        assert_eq!(cameras, vec![expected_camera]);

        let layer_groups = group.group_by::<LayerTrait>();
        assert_eq!(layer_groups.len(), 2);
        assert_eq!(layer_groups[0].key, 0);
        assert_eq!(layer_groups[1].key, 1);

        for (layer_group, &expected_renderable) in layer_groups.iter().zip(expected_layer_pair.iter()) {
            let renderables: Vec<EntityId> =
                layer_group.query::<(Renderable,)>().iter().map(|e| e.id()).collect();
            assert_eq!(renderables, vec![expected_renderable]);
        }
    }
}
