use bevy::prelude::*;
use leafwing_input_manager::prelude::*;

use crate::platform::PlatformHost;

#[derive(Reflect, Actionlike, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputAction {
    TogglePlatform,
    ReloadPlatform,
}

pub(super) fn plugin(app: &mut App) {
    app.add_plugins(InputManagerPlugin::<InputAction>::default());

    app.register_type::<InputAction>();

    let mut input_map = InputMap::<InputAction>::default();
    input_map.insert(InputAction::TogglePlatform, KeyCode::Space);
    input_map.insert(InputAction::ReloadPlatform, KeyCode::KeyR);
    app.insert_resource(input_map);
    app.insert_resource(ActionState::<InputAction>::default());

    app.add_systems(Update, handle_platform_actions);
}

fn handle_platform_actions(
    action_state: Res<ActionState<InputAction>>,
    host: Option<NonSendMut<PlatformHost>>,
) {
    let Some(mut host) = host else {
        return;
    };

    if action_state.just_pressed(&InputAction::TogglePlatform) {
        let enabled = !host.is_enabled();
        if let Err(err) = host.set_enabled(enabled) {
            error!("Failed to toggle platform: {err}");
        }
    }

    if action_state.just_pressed(&InputAction::ReloadPlatform) {
        if let Err(err) = host.reload() {
            error!("Failed to reload platform: {err}");
        }
    }
}
