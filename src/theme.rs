/// The only persisted client preference.
pub const THEME_STORAGE_KEY: &str = "sensores.tema";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemePref {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePref {
    pub const ALL: [ThemePref; 3] = [ThemePref::Light, ThemePref::Dark, ThemePref::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePref::Light => "light",
            ThemePref::Dark => "dark",
            ThemePref::System => "system",
        }
    }

    pub fn from_str(value: &str) -> ThemePref {
        match value {
            "light" => ThemePref::Light,
            "dark" => ThemePref::Dark,
            _ => ThemePref::System,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ThemePref::Light => "Claro",
            ThemePref::Dark => "Oscuro",
            ThemePref::System => "Sistema",
        }
    }
}

pub fn load() -> ThemePref {
    web_sys::window()
        .and_then(|w| w.local_storage().ok().flatten())
        .and_then(|s| s.get_item(THEME_STORAGE_KEY).ok().flatten())
        .map(|v| ThemePref::from_str(&v))
        .unwrap_or_default()
}

pub fn store(pref: ThemePref) {
    if let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) {
        let _ = storage.set_item(THEME_STORAGE_KEY, pref.as_str());
    }
}

/// Resolves `System` against the OS color-scheme preference and stamps the
/// result on the document element.
pub fn apply(pref: ThemePref) {
    let dark = match pref {
        ThemePref::Dark => true,
        ThemePref::Light => false,
        ThemePref::System => prefers_dark(),
    };
    if let Some(root) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.document_element())
    {
        let _ = root.set_attribute("data-theme", if dark { "dark" } else { "light" });
    }
}

fn prefers_dark() -> bool {
    web_sys::window()
        .and_then(|w| w.match_media("(prefers-color-scheme: dark)").ok().flatten())
        .map(|m| m.matches())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_round_trips_through_its_storage_string() {
        for pref in ThemePref::ALL {
            assert_eq!(ThemePref::from_str(pref.as_str()), pref);
        }
    }

    #[test]
    fn unknown_stored_values_fall_back_to_system() {
        assert_eq!(ThemePref::from_str("solarized"), ThemePref::System);
        assert_eq!(ThemePref::from_str(""), ThemePref::System);
    }
}
