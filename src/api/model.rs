use crate::db::UpdatePost;
use crate::error::Error;
use crate::validation::{valid_subdomain, valid_txt, CidrList};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr};

#[derive(Deserialize, Debug, Clone, Default)]
pub(super) struct RegisterRequest {
    #[serde(default, rename = "allowfrom")]
    pub allow_from: CidrList,
}

#[derive(Serialize, Debug, Clone, Default)]
pub(super) struct RegisterResponse {
    pub username: String,
    pub password: String,
    pub fulldomain: String,
    pub subdomain: String,
    pub allowfrom: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub(super) struct UpdateRequest {
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub txt: String,
    #[serde(default)]
    pub a: Vec<String>,
    #[serde(default)]
    pub aaaa: Vec<String>,
}

impl UpdateRequest {
    /// Validates the request and normalizes its addresses into an
    /// [`UpdatePost`]. At least one of `txt`/`a`/`aaaa` must be present.
    pub fn validate(&self) -> Result<UpdatePost, Error> {
        if !valid_subdomain(&self.subdomain) {
            return Err(Error::BadSubdomain);
        }
        if self.txt.is_empty() && self.a.is_empty() && self.aaaa.is_empty() {
            return Err(Error::BadTxt);
        }
        if !self.txt.is_empty() && !valid_txt(&self.txt) {
            return Err(Error::BadTxt);
        }
        Ok(UpdatePost {
            subdomain: self.subdomain.clone(),
            value: self.txt.clone(),
            a_values: self
                .a
                .iter()
                .map(|v| normalize_ipv4(v))
                .collect::<Result<_, _>>()?,
            aaaa_values: self
                .aaaa
                .iter()
                .map(|v| normalize_ipv6(v))
                .collect::<Result<_, _>>()?,
        })
    }
}

// An IPv4-mapped IPv6 value is accepted and stored as its dotted quad.
fn normalize_ipv4(value: &str) -> Result<String, Error> {
    match value.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip.to_string()),
        Ok(IpAddr::V6(ip)) => ip
            .to_ipv4_mapped()
            .map(|ip| ip.to_string())
            .ok_or(Error::BadA),
        Err(_) => Err(Error::BadA),
    }
}

fn normalize_ipv6(value: &str) -> Result<String, Error> {
    match value.trim().parse::<Ipv6Addr>() {
        Ok(ip) if ip.to_ipv4_mapped().is_none() => Ok(ip.to_string()),
        _ => Err(Error::BadAaaa),
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub(super) struct UpdateResponse {
    pub txt: String,
    pub a: String,
    pub aaaa: String,
}

impl From<&UpdatePost> for UpdateResponse {
    fn from(post: &UpdatePost) -> Self {
        UpdateResponse {
            txt: post.value.clone(),
            a: post.a_values.join(" "),
            aaaa: post.aaaa_values.join(" "),
        }
    }
}
