use yukie_domain::config::Config;

#[test]
fn loads_minimal_yaml_with_defaults() {
    let yaml = r#"
services:
  - id: habit-svc
    name: Habit Tracker
    description: logs and queries habits
    baseUrl: https://habit.example.com
    transport: http
    auth:
      method: bearer
      requiredScopes: [habit:write]
    endpoints:
      health: /health
      meta: /meta
      actions: /actions
      invoke: /invoke
    capabilities: [check-in, log, statistics]
    tags: [habit]
    keywords: [habit, log, track]
    riskLevel: low
    priority: 10
"#;
    let cfg: Config = serde_yaml::from_str(yaml).expect("valid yaml");
    assert_eq!(cfg.services.len(), 1);
    assert_eq!(cfg.services[0].id, "habit-svc");
    assert_eq!(cfg.registry.manifest_cache_ttl, 300, "default TTL applied");
    assert_eq!(cfg.registry.max_routing_candidates, 15);
}

#[test]
fn rejects_missing_jwt_secret() {
    let cfg = Config {
        services: vec![],
        ..serde_yaml::from_str("services: []").unwrap()
    };
    let issues = cfg.validate();
    assert!(issues
        .iter()
        .any(|i| i.field.contains("jwt_secret")));
}
