use super::RoleName;

#[test]
fn it_parses_display_names() {
    assert_eq!(RoleName::parse("Writing Assistant"), RoleName::WritingAssistant);
    assert_eq!(RoleName::parse("Translator"), RoleName::Translator);
    assert_eq!(RoleName::parse("Knowledge Base"), RoleName::KnowledgeBase);
}

#[test]
fn it_parses_loose_names() {
    assert_eq!(RoleName::parse("writing-assistant"), RoleName::WritingAssistant);
    assert_eq!(RoleName::parse("SNOWFLAKE sql expert"), RoleName::SnowflakeSqlExpert);
}

#[test]
fn it_falls_back_to_default() {
    assert_eq!(RoleName::parse("Pirate"), RoleName::Default);
    assert_eq!(RoleName::parse(""), RoleName::Default);
}

#[test]
fn it_round_trips_through_display() {
    for role in [
        RoleName::AdTechStrategist,
        RoleName::PerformanceAnalyst,
        RoleName::Custom,
    ] {
        assert_eq!(RoleName::parse(&role.to_string()), role);
    }
}

#[test]
fn it_only_enables_retrieval_for_knowledge_base() {
    assert!(RoleName::KnowledgeBase.profile().retrieval);
    assert!(!RoleName::Default.profile().retrieval);
    assert!(!RoleName::Translator.profile().retrieval);
}

#[test]
fn it_builds_role_greetings() {
    insta::assert_snapshot!(RoleName::Translator.profile().greeting, @"Hello! I'm your Translator AI assistant. How can I help you today?");
    insta::assert_snapshot!(RoleName::Default.profile().greeting, @"Hello! I'm your AI assistant. How can I help you today?");
}

#[test]
fn it_overrides_system_prompt() {
    let profile = RoleName::Custom.profile().with_system_prompt("Talk like a pirate.");
    assert_eq!(profile.system_prompt, "Talk like a pirate.");

    let profile = RoleName::Translator.profile().with_system_prompt("  ");
    assert!(profile.system_prompt.starts_with("You are a professional translator."));
}
