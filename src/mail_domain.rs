use async_trait::async_trait;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;

/// What DNS says about a domain's ability to receive mail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailDomainStatus {
    AcceptsMail,
    /// The MX answer was present but listed no exchanges.
    NoMailServers,
    /// The domain does not resolve or carries no MX records at all.
    DoesNotExist,
}

#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn mail_domain_status(&self, domain: &str) -> Result<MailDomainStatus, anyhow::Error>;
}

pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
}

impl DnsMxResolver {
    /// Uses the host's resolver configuration (`/etc/resolv.conf` on Unix).
    pub fn from_system_conf() -> Result<DnsMxResolver, anyhow::Error> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl MxResolver for DnsMxResolver {
    #[tracing::instrument(name = "Look up MX records", skip(self))]
    async fn mail_domain_status(&self, domain: &str) -> Result<MailDomainStatus, anyhow::Error> {
        let answer = self
            .resolver
            .mx_lookup(domain)
            .await
            .map(|lookup| lookup.iter().count());
        classify(answer).map_err(|e| {
            anyhow::Error::new(e).context(format!("Failed to resolve the MX records of {}", domain))
        })
    }
}

/// NXDOMAIN and an empty NOERROR answer both surface as `NoRecordsFound`.
fn classify(answer: Result<usize, ResolveError>) -> Result<MailDomainStatus, ResolveError> {
    match answer {
        Ok(0) => Ok(MailDomainStatus::NoMailServers),
        Ok(_) => Ok(MailDomainStatus::AcceptsMail),
        Err(e) => match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => Ok(MailDomainStatus::DoesNotExist),
            _ => Err(e),
        },
    }
}
