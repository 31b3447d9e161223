use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{ServiceError, check_status};

const SERVICE: &str = "Pinata";
const API_BASE: &str = "https://api.pinata.cloud";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResult {
    ipfs_hash: String,
}

/// Pins JSON documents and files to IPFS through Pinata's API-key auth.
pub struct PinataClient {
    http: reqwest::Client,
    api_key: String,
    secret_api_key: String,
}

impl PinataClient {
    pub fn new(http: reqwest::Client, api_key: String, secret_api_key: String) -> Self {
        Self {
            http,
            api_key,
            secret_api_key,
        }
    }

    /// Returns the CID of the pinned document.
    pub async fn pin_json(&self, name: &str, content: &Value) -> Result<String, ServiceError> {
        let body = json!({
            "pinataContent": content,
            "pinataMetadata": { "name": name },
        });
        let req = self.http.post(format!("{}/pinning/pinJSONToIPFS", API_BASE)).json(&body);
        let cid = self.send(req).await?;
        debug!(%cid, name, "Pinned JSON");
        Ok(cid)
    }

    pub async fn pin_file(&self, file_name: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, ServiceError> {
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ServiceError::malformed(SERVICE, format!("bad content type: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("pinataMetadata", json!({ "name": file_name }).to_string());

        let req = self.http.post(format!("{}/pinning/pinFileToIPFS", API_BASE)).multipart(form);
        let cid = self.send(req).await?;
        debug!(%cid, file_name, size, "Pinned file");
        Ok(cid)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<String, ServiceError> {
        let resp = req
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.secret_api_key)
            .send()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        let result: PinResult = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(ServiceError::transport(SERVICE))?;
        Ok(result.ipfs_hash)
    }
}

/// Fetches a JSON document through a public gateway.
pub async fn fetch_json(http: &reqwest::Client, gateway: &str, cid: &str) -> Result<Value, ServiceError> {
    let url = format!("{}/ipfs/{}", gateway.trim_end_matches('/'), cid);
    let resp = http.get(&url).send().await.map_err(ServiceError::transport("IPFS gateway"))?;
    check_status("IPFS gateway", resp)
        .await?
        .json()
        .await
        .map_err(|e| ServiceError::malformed("IPFS gateway", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_result_shape() {
        let r: PinResult = serde_json::from_str(
            r#"{"IpfsHash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","PinSize":1234,"Timestamp":"2024-05-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(r.ipfs_hash, "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
    }
}
