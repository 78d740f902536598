//! Static record parsing.
//!
//! `general.records` holds zone-file-style lines (`name [ttl] TYPE rdata...`)
//! that are parsed once at startup into trust-dns [`Record`]s; queries never
//! re-parse them.

use crate::error::Error;
use std::str::FromStr;
use trust_dns_proto::rr::rdata::SOA;
use trust_dns_server::client::rr::rdata::TXT;
use trust_dns_server::client::rr::{Name, RData, Record};

/// TTL for records that come from the configuration. Dynamic answers use
/// [`super::handlers::DYNAMIC_TTL`] instead.
pub const STATIC_TTL: u32 = 3600;

/// Parses every non-empty line into a [`Record`]. Relative names are made
/// absolute under `origin`.
pub fn parse_records(lines: &[String], origin: &Name) -> Result<Vec<Record>, Error> {
    lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parse_line(line, origin))
        .collect()
}

fn parse_line(line: &str, origin: &Name) -> Result<Record, Error> {
    let err = || Error::InvalidStaticRecord(line.to_string());
    let mut tokens = line.split_whitespace();

    let name = absolute_name(tokens.next().ok_or_else(err)?, origin).ok_or_else(err)?;
    let mut rtype = tokens.next().ok_or_else(err)?;
    let ttl = match rtype.parse::<u32>() {
        Ok(ttl) => {
            rtype = tokens.next().ok_or_else(err)?;
            ttl
        }
        Err(_) => STATIC_TTL,
    };

    let rdata = match rtype.to_ascii_uppercase().as_str() {
        "A" => single_token(&mut tokens)
            .and_then(|v| v.parse().ok())
            .map(RData::A)
            .ok_or_else(err)?,
        "AAAA" => single_token(&mut tokens)
            .and_then(|v| v.parse().ok())
            .map(RData::AAAA)
            .ok_or_else(err)?,
        "CNAME" => single_token(&mut tokens)
            .and_then(|v| absolute_name(v, origin))
            .map(RData::CNAME)
            .ok_or_else(err)?,
        "NS" => single_token(&mut tokens)
            .and_then(|v| absolute_name(v, origin))
            .map(RData::NS)
            .ok_or_else(err)?,
        "TXT" => {
            let rest = tokens.collect::<Vec<_>>().join(" ");
            if rest.is_empty() {
                return Err(err());
            }
            RData::TXT(TXT::new(vec![rest.trim_matches('"').to_string()]))
        }
        "SOA" => {
            let mname = tokens
                .next()
                .and_then(|v| absolute_name(v, origin))
                .ok_or_else(err)?;
            let rname = tokens
                .next()
                .and_then(|v| absolute_name(v, origin))
                .ok_or_else(err)?;
            let mut fields = [0_i64; 5];
            for field in &mut fields {
                *field = tokens
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(err)?;
            }
            if tokens.next().is_some() {
                return Err(err());
            }
            RData::SOA(SOA::new(
                mname,
                rname,
                fields[0] as u32,
                fields[1] as i32,
                fields[2] as i32,
                fields[3] as i32,
                fields[4] as u32,
            ))
        }
        _ => return Err(err()),
    };

    Ok(Record::from_rdata(name, ttl, rdata))
}

// Consumes exactly one remaining token; trailing garbage fails the line.
fn single_token<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let value = tokens.next()?;
    match tokens.next() {
        Some(_) => None,
        None => Some(value),
    }
}

fn absolute_name(s: &str, origin: &Name) -> Option<Name> {
    let name = Name::from_str(s).ok()?;
    if name.is_fqdn() {
        Some(name)
    } else {
        name.append_domain(origin).ok()
    }
}
