// Configuration loading and validation tests

use rstest::rstest;
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;

use kumo::config::*;

const FULL_YAML: &str = r#"
server:
  address: "127.0.0.1"
  port: 8081
  threads: 2
  routes: ["/weather", "/tokyo"]
secret:
  provider: ssm
  parameter_name: "/tokyo-weather-api/openweathermap-api-key"
cache:
  backend: dynamodb
  table_name: "WeatherCache"
  ttl_seconds: 3600
origin:
  base_url: "https://api.openweathermap.org/data/2.5/weather"
  units: metric
  timeout_seconds: 10
aws:
  region: "ap-northeast-1"
  endpoint_url: "http://localhost:4566"
default_location: "1850147"
"#;

fn valid() -> Config {
    serde_yaml::from_str(FULL_YAML).expect("Failed to deserialize YAML")
}

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_full_yaml_round_trips_every_section() {
    let config = valid();

    assert_eq!(config.server.threads, 2);
    assert_eq!(config.secret.provider, SecretProvider::Ssm);
    assert_eq!(config.cache.table_name.as_deref(), Some("WeatherCache"));
    assert_eq!(config.aws.region.as_deref(), Some("ap-northeast-1"));
    assert_eq!(config.aws.endpoint_url.as_deref(), Some("http://localhost:4566"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_yaml_env_references_are_substituted() {
    std::env::set_var("KUMO_TEST_TABLE_NAME", "WeatherCacheFromEnv");
    let yaml = FULL_YAML.replace("\"WeatherCache\"", "\"${KUMO_TEST_TABLE_NAME}\"");

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(
        config.cache.table_name.as_deref(),
        Some("WeatherCacheFromEnv")
    );
}

#[test]
fn test_yaml_with_unset_reference_fails_to_load() {
    let yaml = FULL_YAML.replace("\"WeatherCache\"", "\"${KUMO_TEST_NEVER_SET_VARIABLE}\"");
    let err = Config::from_yaml_with_env(&yaml).unwrap_err();
    assert!(err.contains("KUMO_TEST_NEVER_SET_VARIABLE"));
}

#[test]
fn test_unknown_backend_is_a_parse_error() {
    let yaml = FULL_YAML.replace("backend: dynamodb", "backend: memcached");
    assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
}

#[rstest]
#[case::empty_secret_name(|c: &mut Config| c.secret.parameter_name = " ".into(), "secret.parameter_name")]
#[case::empty_location(|c: &mut Config| c.default_location = String::new(), "default_location")]
#[case::zero_ttl(|c: &mut Config| c.cache.ttl_seconds = 0, "ttl_seconds")]
#[case::missing_table(|c: &mut Config| c.cache.table_name = None, "table_name")]
#[case::redis_without_url(|c: &mut Config| c.cache.backend = CacheBackend::Redis, "redis_url")]
#[case::redis_bad_scheme(|c: &mut Config| {
    c.cache.backend = CacheBackend::Redis;
    c.cache.redis_url = Some("http://localhost:6379".into());
}, "redis://")]
#[case::memory_zero_entries(|c: &mut Config| {
    c.cache.backend = CacheBackend::Memory;
    c.cache.memory_max_entries = 0;
}, "memory_max_entries")]
#[case::origin_not_a_url(|c: &mut Config| c.origin.base_url = "weather".into(), "origin.base_url")]
#[case::origin_ftp(|c: &mut Config| c.origin.base_url = "ftp://example.com/weather".into(), "http or https")]
#[case::zero_timeout(|c: &mut Config| c.origin.timeout_seconds = 0, "timeout_seconds")]
#[case::empty_units(|c: &mut Config| c.origin.units = String::new(), "units")]
#[case::zero_port(|c: &mut Config| c.server.port = 0, "server.port")]
#[case::no_routes(|c: &mut Config| c.server.routes.clear(), "at least one route")]
#[case::route_shadows_metrics(|c: &mut Config| c.server.routes.push("/metrics".into()), "built-in")]
fn test_validation_rejects_invalid_setting(
    #[case] mutate: fn(&mut Config),
    #[case] expected: &str,
) {
    let mut config = valid();
    mutate(&mut config);

    let err = config.validate().unwrap_err();
    assert!(err.contains(expected), "expected '{}' in '{}'", expected, err);
}

#[rstest]
#[case("redis://localhost:6379")]
#[case("rediss://cache.example.com:6380/0")]
fn test_redis_urls_accepted(#[case] url: &str) {
    let mut config = valid();
    config.cache.backend = CacheBackend::Redis;
    config.cache.redis_url = Some(url.to_string());
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_mode_mirrors_deployment_variables() {
    let config = Config::from_env_lookup(lookup(&[
        ("SSM_PARAM_NAME", "/tokyo-weather-api/openweathermap-api-key"),
        ("CACHE_TABLE_NAME", "WeatherCache"),
        ("AWS_ENDPOINT_URL", "http://localhost:4566"),
        ("ORIGIN_BASE_URL", "http://localhost:3000/weather"),
    ]))
    .unwrap();

    assert_eq!(config.secret.provider, SecretProvider::Ssm);
    assert_eq!(config.cache.backend, CacheBackend::Dynamodb);
    assert_eq!(config.cache.ttl_seconds, 3600);
    assert_eq!(config.default_location, "1850147");
    assert_eq!(config.origin.base_url, "http://localhost:3000/weather");
    assert_eq!(config.aws.endpoint_url.as_deref(), Some("http://localhost:4566"));
    assert_eq!(config.server, ServerConfig::default());
    assert!(config.validate().is_ok());
}

#[rstest]
#[case("0")]
#[case("-5")]
#[case("soon")]
fn test_env_mode_rejects_bad_ttl(#[case] ttl: &str) {
    let result = Config::from_env_lookup(lookup(&[
        ("SSM_PARAM_NAME", "p"),
        ("CACHE_TABLE_NAME", "t"),
        ("CACHE_TTL_SECONDS", ttl),
    ]))
    .and_then(|config| config.validate());

    assert!(result.is_err(), "ttl '{}' should be rejected", ttl);
}

#[test]
fn test_env_mode_requires_table_for_dynamodb() {
    let config = Config::from_env_lookup(lookup(&[("SSM_PARAM_NAME", "p")])).unwrap();
    assert!(config.validate().unwrap_err().contains("table_name"));
}

#[test]
fn test_env_mode_rejects_unknown_backend() {
    let err = Config::from_env_lookup(lookup(&[
        ("SSM_PARAM_NAME", "p"),
        ("CACHE_BACKEND", "sqlite"),
    ]))
    .unwrap_err();
    assert!(err.contains("CACHE_BACKEND"));
}
