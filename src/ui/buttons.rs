use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
    model::id::UserId,
};

use crate::audio::queue::LoopMode;

/// IDs personalizados para los botones
pub mod button_ids {
    pub const PAUSE_RESUME: &str = "music_pause_resume";
    pub const SKIP: &str = "music_skip";
    pub const LOOP: &str = "music_loop";
    pub const STOP: &str = "music_stop";
    pub const QUEUE: &str = "music_queue";

    /// Prefijo; el ID completo lleva el usuario del perfil
    pub const PROFILE_REFRESH: &str = "profile_refresh";
}

/// Controles del aviso "now playing"
pub fn create_player_buttons(loop_mode: LoopMode) -> Vec<CreateActionRow> {
    let loop_style = match loop_mode {
        LoopMode::Off => ButtonStyle::Secondary,
        _ => ButtonStyle::Success,
    };
    let loop_emoji = match loop_mode {
        LoopMode::Track => '🔂',
        _ => '🔁',
    };

    let row = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::PAUSE_RESUME)
            .emoji('⏯')
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::SKIP)
            .emoji('⏭')
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::LOOP)
            .emoji(loop_emoji)
            .style(loop_style),
        CreateButton::new(button_ids::STOP)
            .emoji('⏹')
            .style(ButtonStyle::Danger),
        CreateButton::new(button_ids::QUEUE)
            .label("Cola")
            .emoji('📋')
            .style(ButtonStyle::Secondary),
    ]);

    vec![row]
}

pub fn create_profile_buttons(user_id: UserId) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![CreateButton::new(format!(
        "{}:{}",
        button_ids::PROFILE_REFRESH,
        user_id
    ))
    .label("Actualizar")
    .emoji('🔄')
    .style(ButtonStyle::Secondary)])]
}

/// Usuario de un botón de perfil
pub fn parse_profile_refresh(custom_id: &str) -> Option<UserId> {
    let raw = custom_id
        .strip_prefix(button_ids::PROFILE_REFRESH)?
        .strip_prefix(':')?;
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(UserId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_refresh_id_round_trips_the_user() {
        let id = format!("{}:{}", button_ids::PROFILE_REFRESH, 1234);
        assert_eq!(parse_profile_refresh(&id), Some(UserId::new(1234)));
    }

    #[test]
    fn foreign_ids_are_not_profile_refreshes() {
        assert_eq!(parse_profile_refresh(button_ids::SKIP), None);
        assert_eq!(parse_profile_refresh("profile_refresh:abc"), None);
        assert_eq!(parse_profile_refresh("profile_refresh:0"), None);
    }
}
