use crate::types::GameMode;

/// Mode class names reported by Raven Shield and Athena Sword servers.
const GAME_MODES: &[(&str, GameMode)] = &[
    // Raven Shield
    ("RGM_BombAdvMode", GameMode::Adversarial),           // Bomb
    ("RGM_DeathmatchMode", GameMode::Adversarial),        // Survival
    ("RGM_EscortAdvMode", GameMode::Adversarial),         // Pilot
    ("RGM_HostageRescueAdvMode", GameMode::Adversarial),  // Hostage
    ("RGM_HostageRescueCoopMode", GameMode::Cooperative), // Hostage Rescue
    ("RGM_HostageRescueMode", GameMode::Cooperative),
    ("RGM_MissionMode", GameMode::Cooperative),
    ("RGM_SquadDeathmatch", GameMode::Adversarial),
    ("RGM_SquadTeamDeathmatch", GameMode::Adversarial),
    ("RGM_TeamDeathmatchMode", GameMode::Adversarial),    // Team Survival
    ("RGM_TerroristHuntCoopMode", GameMode::Cooperative), // Terrorist Hunt
    ("RGM_TerroristHuntMode", GameMode::Cooperative),
    // Athena Sword
    ("RGM_CaptureTheEnemyAdvMode", GameMode::Adversarial),
    ("RGM_CountDownMode", GameMode::Cooperative),
    ("RGM_KamikazeMode", GameMode::Adversarial),
    ("RGM_ScatteredHuntAdvMode", GameMode::Adversarial),
    ("RGM_TerroristHuntAdvMode", GameMode::Adversarial),
];

pub(crate) fn classify(name: &str) -> Option<GameMode> {
    GAME_MODES
        .iter()
        .find(|(mode, _)| *mode == name)
        .map(|(_, class)| *class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_modes() {
        assert_eq!(classify("RGM_BombAdvMode"), Some(GameMode::Adversarial));
        assert_eq!(classify("RGM_MissionMode"), Some(GameMode::Cooperative));
        assert_eq!(classify("RGM_TerroristHuntAdvMode"), Some(GameMode::Adversarial));
    }

    #[test]
    fn test_classify_unknown_mode() {
        assert_eq!(classify(""), None);
        assert_eq!(classify("rgm_bombadvmode"), None);
    }
}
