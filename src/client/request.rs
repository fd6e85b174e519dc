use crate::config::ClientConfig;
use crate::error::Error;

use http::{header, Method, Request};
use hyper::Body;
use serde_json::Value;
use url::Url;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MergeStrategy {
    Json,
    JsonMerge,
    StrategicMerge,
}

impl MergeStrategy {
    pub fn content_type(&self) -> &'static str {
        match *self {
            MergeStrategy::Json => "application/json-patch+json",
            MergeStrategy::JsonMerge => "application/merge-patch+json",
            MergeStrategy::StrategicMerge => "application/strategic-merge-patch+json",
        }
    }
}

pub fn get_request(client_config: &ClientConfig, url: Url) -> Result<Request<Body>, Error> {
    let req = make_req(url, Method::GET, client_config).body(Body::empty())?;
    Ok(req)
}

pub fn create_request(
    client_config: &ClientConfig,
    url: Url,
    resource: &Value,
) -> Result<Request<Body>, Error> {
    json_body_request(client_config, url, Method::POST, JSON_CONTENT_TYPE, resource)
}

pub fn replace_request(
    client_config: &ClientConfig,
    url: Url,
    resource: &Value,
) -> Result<Request<Body>, Error> {
    json_body_request(client_config, url, Method::PUT, JSON_CONTENT_TYPE, resource)
}

pub fn patch_request(
    client_config: &ClientConfig,
    url: Url,
    patch: &Value,
    merge_strategy: MergeStrategy,
) -> Result<Request<Body>, Error> {
    json_body_request(
        client_config,
        url,
        Method::PATCH,
        merge_strategy.content_type(),
        patch,
    )
}

pub fn delete_request(client_config: &ClientConfig, url: Url) -> Result<Request<Body>, Error> {
    let req = make_req(url, Method::DELETE, client_config).body(Body::empty())?;
    Ok(req)
}

fn json_body_request(
    client_config: &ClientConfig,
    url: Url,
    method: Method,
    content_type: &str,
    body: &Value,
) -> Result<Request<Body>, Error> {
    let as_vec = serde_json::to_vec(body)?;
    let req = make_req(url, method, client_config)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(as_vec))?;
    Ok(req)
}

fn make_req(url: Url, method: Method, client_config: &ClientConfig) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(String::from(url))
        .header(
            header::AUTHORIZATION,
            client_config.connection.authorization_header(),
        )
        .header(header::ACCEPT, JSON_CONTENT_TYPE)
        .header(header::USER_AGENT, client_config.user_agent.as_str())
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn config() -> ClientConfig {
        ClientConfig::new("https://master:8443", "secret-token").with_user_agent("test-agent")
    }

    #[test]
    fn requests_carry_bearer_token_and_user_agent() {
        let url = Url::parse("https://master:8443/oapi/v1/projects/p").unwrap();
        let req = get_request(&config(), url).unwrap();
        assert_eq!(Method::GET, req.method());
        assert_eq!("https://master:8443/oapi/v1/projects/p", req.uri().to_string());
        assert_eq!(req.headers()[header::AUTHORIZATION], "bearer secret-token");
        assert_eq!(req.headers()[header::USER_AGENT], "test-agent");
    }

    #[test]
    fn patch_request_uses_strategic_merge_content_type() {
        let url = Url::parse("https://master:8443/oapi/v1/namespaces/a/buildconfigs/b").unwrap();
        let patch = json!({"spec": {"runPolicy": "Serial"}});
        let req = patch_request(&config(), url, &patch, MergeStrategy::StrategicMerge).unwrap();
        assert_eq!(Method::PATCH, req.method());
        assert_eq!(
            req.headers()[header::CONTENT_TYPE],
            "application/strategic-merge-patch+json"
        );
    }

    #[test]
    fn create_request_posts_json() {
        let url = Url::parse("https://master:8443/api/v1/namespaces/a/secrets").unwrap();
        let req = create_request(&config(), url, &json!({"kind": "Secret"})).unwrap();
        assert_eq!(Method::POST, req.method());
        assert_eq!(req.headers()[header::CONTENT_TYPE], JSON_CONTENT_TYPE);
    }
}
