use crate::config::Config;
use crate::db::SharedStore;
use crate::dns::zone;
use crate::error::Error;
use crate::validation::sanitize;
use lazy_static::lazy_static;
use std::borrow::Cow;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::error;
use trust_dns_proto::rr::rdata::SOA;
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::rdata::TXT;
use trust_dns_server::client::rr::{DNSClass, LowerName, Name, RData, Record, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

/// TTL for dynamic answers. One second forces clients to re-query, which
/// matters because TXT values flip between the two slots on every update.
pub const DYNAMIC_TTL: u32 = 1;

lazy_static! {
    static ref SERIAL_FORMATTER: &'static [time::format_description::FormatItem<'static>] =
        format_description!(version = 2, "[year][month][day]");
}

/// Authoritative responder for the configured apex, every account subdomain
/// under it, and any name carrying a static record.
pub struct Handler {
    origin: LowerName,
    origin_name: Name,
    nsname: Name,
    ns_admin: Name,
    own_challenge: LowerName,
    own_challenge_key: Arc<RwLock<Option<String>>>,
    static_records: HashMap<LowerName, Vec<Record>>,
    store: SharedStore,
}

/// Outcome of resolving one question.
pub(crate) enum Lookup {
    /// The name is outside this server's authority.
    Refused,
    /// The name is inside the authority but does not exist.
    NxDomain,
    /// The name exists; the records may be empty (NOERROR with no answer).
    Records(Vec<Record>),
}

impl Handler {
    pub fn new(config: &Config, store: SharedStore) -> Result<Self, Error> {
        let mut origin_name = Name::from_str(&config.general.domain)?;
        origin_name.set_fqdn(true);
        let origin = LowerName::from(origin_name.clone());

        let own_challenge =
            LowerName::from(Name::from_str("_acme-challenge")?.append_domain(&origin_name)?);

        let mut static_records: HashMap<LowerName, Vec<Record>> = HashMap::new();
        for record in zone::parse_records(&config.general.records, &origin_name)? {
            static_records
                .entry(LowerName::new(record.name()))
                .or_default()
                .push(record);
        }

        let nsname = if config.general.nsname.is_empty() {
            origin_name.clone()
        } else {
            let mut nsname = Name::from_str(&config.general.nsname)?;
            nsname.set_fqdn(true);
            nsname
        };
        let ns_admin = ns_admin_name(&config.general.nsadmin, &origin_name)?;

        Ok(Handler {
            origin,
            origin_name,
            nsname,
            ns_admin,
            own_challenge,
            own_challenge_key: Arc::new(RwLock::new(config.general.own_challenge_key.clone())),
            static_records,
            store,
        })
    }

    /// Replaces the TXT value served for `_acme-challenge.<apex>`. `None`
    /// makes the name disappear again.
    pub async fn set_own_challenge_key(&self, key: Option<String>) {
        *self.own_challenge_key.write().await = key;
    }

    /// True iff this server should answer for `qname`: the apex, any
    /// descendant of it, or a name carrying static records.
    pub(crate) fn is_authoritative(&self, qname: &LowerName) -> bool {
        self.origin.zone_of(qname) || self.static_records.contains_key(qname)
    }

    pub(crate) async fn lookup(
        &self,
        qname: &LowerName,
        qtype: RecordType,
    ) -> Result<Lookup, Error> {
        if !self.is_authoritative(qname) {
            return Ok(Lookup::Refused);
        }

        // The server's own challenge short-circuits everything else: the name
        // only exists while a key is provisioned.
        if *qname == self.own_challenge && matches!(qtype, RecordType::TXT | RecordType::ANY) {
            return Ok(match self.own_challenge_record().await {
                Some(record) => Lookup::Records(vec![record]),
                None => Lookup::NxDomain,
            });
        }

        let mut answers = self.static_answers(qname, qtype);
        if answers.is_empty() && qtype == RecordType::SOA && *qname == self.origin {
            answers.push(self.soa_record());
        }

        if self.origin.zone_of(qname) && *qname != self.origin {
            let label = first_label(qname);
            match qtype {
                RecordType::TXT => {
                    let values = self.store.get_txt(&label).await?;
                    answers.extend(values.into_iter().filter(|v| !v.is_empty()).map(|value| {
                        Record::from_rdata(
                            qname.into(),
                            DYNAMIC_TTL,
                            RData::TXT(TXT::new(vec![value])),
                        )
                    }));
                }
                RecordType::A => {
                    answers.extend(
                        self.store.get_a(&label).await?.into_iter().map(|ip| {
                            Record::from_rdata(qname.into(), DYNAMIC_TTL, RData::A(ip))
                        }),
                    );
                }
                RecordType::AAAA => {
                    answers.extend(self.store.get_aaaa(&label).await?.into_iter().map(|ip| {
                        Record::from_rdata(qname.into(), DYNAMIC_TTL, RData::AAAA(ip))
                    }));
                }
                _ => {}
            }
        }

        if !answers.is_empty() {
            return Ok(Lookup::Records(answers));
        }
        if self.name_exists(qname).await? {
            return Ok(Lookup::Records(Vec::new()));
        }
        Ok(Lookup::NxDomain)
    }

    // A name exists if anything at all would answer for it: static records,
    // the apex itself, a provisioned own-challenge key, or any dynamic record
    // under the account label.
    async fn name_exists(&self, qname: &LowerName) -> Result<bool, Error> {
        if *qname == self.origin || self.static_records.contains_key(qname) {
            return Ok(true);
        }
        if *qname == self.own_challenge {
            return Ok(self.own_challenge_key.read().await.is_some());
        }
        if self.origin.zone_of(qname) {
            return Ok(self.store.count_records(&first_label(qname)).await? > 0);
        }
        Ok(false)
    }

    fn static_answers(&self, qname: &LowerName, qtype: RecordType) -> Vec<Record> {
        self.static_records
            .get(qname)
            .map_or_else(Vec::new, |records| {
                records
                    .iter()
                    .filter(|r| qtype == RecordType::ANY || r.record_type() == qtype)
                    .cloned()
                    .collect()
            })
    }

    async fn own_challenge_record(&self) -> Option<Record> {
        let key = self.own_challenge_key.read().await;
        key.as_ref().map(|value| {
            Record::from_rdata(
                (&self.own_challenge).into(),
                DYNAMIC_TTL,
                RData::TXT(TXT::new(vec![value.clone()])),
            )
        })
    }

    fn soa_record(&self) -> Record {
        // NB: unwraps are safe: known date format producing values that will
        // always parse as u32.
        let serial: u32 = OffsetDateTime::now_utc()
            .format(&SERIAL_FORMATTER)
            .unwrap()
            .parse()
            .unwrap();
        // See RIPE 203[0] for recommended values.
        // [0]: https://www.ripe.net/publications/docs/ripe-203
        let rdata = RData::SOA(SOA::new(
            self.nsname.clone(),
            self.ns_admin.clone(),
            serial,
            86_400,    // 24 hrs.
            7_200,     // 2 hours.
            3_600_000, // 1000 hours.
            172_800,   // 2 days.
        ));
        Record::from_rdata(self.origin_name.clone(), zone::STATIC_TTL, rdata)
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response: R,
    ) -> Result<ResponseInfo, Error> {
        // If it isn't a query, return NOTIMPL.
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return self.send_notimpl(request, response).await;
        }
        // IN only.
        if request.query().query_class() != DNSClass::IN {
            return self.send_refused(request, response).await;
        }

        let qname = request.query().name().clone();
        match self.lookup(&qname, request.query().query_type()).await? {
            Lookup::Refused => self.send_refused(request, response).await,
            Lookup::NxDomain => self.send_nxdomain(request, response).await,
            Lookup::Records(records) => self.send_records(request, response, records).await,
        }
    }

    async fn send_notimpl<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
            .await?)
    }

    async fn send_refused<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let response = MessageResponseBuilder::from_message_request(request);
        Ok(response_handle
            .send_response(response.error_msg(request.header(), ResponseCode::Refused))
            .await?)
    }

    async fn send_nxdomain<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        let builder = MessageResponseBuilder::from_message_request(request);
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_recursion_available(false);
        header.set_response_code(ResponseCode::NXDomain);
        let response = builder.build_no_records(header);
        Ok(response_handle.send_response(response).await?)
    }

    async fn send_records<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
        records: Vec<Record>,
    ) -> Result<ResponseInfo, Error> {
        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        header.set_recursion_available(false);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }
}

// The label immediately below the apex, sanitized for the store.
fn first_label(qname: &LowerName) -> String {
    let name = Name::from(qname);
    name.iter()
        .next()
        .map(|label| sanitize(&String::from_utf8_lossy(label)))
        .unwrap_or_default()
}

fn ns_admin_name(ns_admin: &str, origin: &Name) -> Result<Name, Error> {
    if ns_admin.is_empty() {
        return Ok(Name::from_str("hostmaster")?.append_domain(origin)?);
    }
    let mailbox: Cow<'_, str> = match ns_admin.split_once('@') {
        Some((user, domain)) => {
            let user = user.replace('.', "\\.");
            Cow::Owned(format!("{user}.{domain}"))
        }
        None => Cow::Borrowed(ns_admin),
    };
    let name = Name::from_str(&mailbox)?;
    Ok(if name.is_fqdn() {
        name
    } else {
        name.append_domain(origin)?
    })
}

#[async_trait::async_trait]
impl RequestHandler for Handler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(err) => {
                error!("error in RequestHandler: {:?}", err);
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
