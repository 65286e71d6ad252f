use bevy::prelude::*;

pub(super) fn plugin(app: &mut App) {
    app.add_systems(Startup, add_camera_and_light);
}

const CAMERA_POSITION: Vec3 = Vec3::new(0.0, 4.0, 12.0);
const CAMERA_TARGET: Vec3 = Vec3::new(0.0, 2.0, -6.0);

fn add_camera_and_light(mut commands: Commands) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(CAMERA_POSITION).looking_at(CAMERA_TARGET, Vec3::Y),
    ));

    commands.spawn((
        PointLight {
            shadows_enabled: true,
            intensity: 2_000_000.0,
            range: 60.0,
            ..default()
        },
        Transform::from_xyz(0.0, 10.0, 4.0),
    ));
}
