#[path = "../common/mod.rs"]
mod common;

use common::{Harness, ScriptedProbe};
use tracefix::core::mode::{mode_factory, Level, Mode, ModeState};
use tracefix::core::plugin::{capabilities, CapabilityOverrides};
use tracefix::core::{AppError, ErrorCategory};

fn factory(harness: &Harness, plugin_type: &str, name: &str, level: &str) -> Result<Mode, AppError> {
    let env = harness.environment(&[]);
    let definition = env.registry().lookup(plugin_type, name)?;
    let plugin = definition.construct(&harness.target)?;
    mode_factory(definition.capabilities(), level, env.clone(), plugin)
}

fn factory_error(result: Result<Mode, AppError>) -> AppError {
    match result {
        Ok(mode) => panic!("expected an error, got {} mode", mode.name()),
        Err(err) => err,
    }
}

#[test]
fn test_static_plugin_is_static_mode_at_every_level() {
    let harness = Harness::new(ScriptedProbe::new(&[]));

    for level in Level::ALL {
        let mode = factory(&harness, "javascript", "header", level.as_str()).unwrap();
        assert!(matches!(mode, Mode::Static(_)), "level {}", level);
        assert_eq!(mode.name(), "static");
        assert!(!mode.is_dynamic());
        assert_eq!(mode.state(), ModeState::Idle);
    }
}

#[test]
fn test_dynamic_plugin_mode_follows_level() {
    let harness = Harness::new(ScriptedProbe::new(&[]));

    let extract = factory(&harness, "template", "disambiguate", "extract").unwrap();
    let modify = factory(&harness, "template", "disambiguate", "modify").unwrap();
    let wizard = factory(&harness, "template", "disambiguate", "wizard").unwrap();

    assert!(matches!(extract, Mode::Extract(_)));
    assert!(matches!(modify, Mode::Modify(_)));
    assert!(matches!(wizard, Mode::Wizard(_)));
    for mode in [&extract, &modify, &wizard] {
        assert!(mode.is_dynamic());
        assert_eq!(mode.original_branch(), None);
    }
}

#[test]
fn test_unknown_level_is_rejected_for_every_plugin_shape() {
    let harness = Harness::new(ScriptedProbe::new(&[]));

    for (plugin_type, name) in [("javascript", "header"), ("template", "disambiguate")] {
        let err = factory_error(factory(&harness, plugin_type, name, "havoc"));
        assert!(err.is_configuration());
        assert_eq!(err.message, r#"Level "havoc" is not a supported level."#);
    }
    assert!(harness.vcs.commands().is_empty());
}

#[test]
fn test_levels_are_case_sensitive() {
    let err = "Extract".parse::<Level>().unwrap_err();
    assert_eq!(err.message, r#"Level "Extract" is not a supported level."#);
    assert_eq!("wizard".parse::<Level>().unwrap(), Level::Wizard);
}

#[test]
fn test_plugin_shape_must_match_capabilities() {
    let harness = Harness::new(ScriptedProbe::new(&[]));
    let env = harness.environment(&[]);

    let dynamic = env.registry().lookup("template", "disambiguate").unwrap();
    let err = factory_error(mode_factory(
        capabilities(None),
        "modify",
        env.clone(),
        dynamic.construct(&harness.target).unwrap(),
    ));
    assert_eq!(err.category, ErrorCategory::PluginError);

    let static_plugin = env.registry().lookup("javascript", "header").unwrap();
    let err = factory_error(mode_factory(
        capabilities(Some(CapabilityOverrides {
            runtime: Some(true),
        })),
        "modify",
        env.clone(),
        static_plugin.construct(&harness.target).unwrap(),
    ));
    assert_eq!(err.category, ErrorCategory::PluginError);
}

#[test]
fn test_capabilities_default_to_static() {
    assert!(!capabilities(None).runtime);
    assert!(!capabilities(Some(CapabilityOverrides::default())).runtime);
    assert!(
        capabilities(Some(CapabilityOverrides {
            runtime: Some(true)
        }))
        .runtime
    );
}
