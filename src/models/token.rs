use crate::domain::{self, TokenKind};
use crate::schema::tokens;
use chrono::offset::Utc;
use chrono::DateTime;

#[derive(Queryable, Selectable)]
#[diesel(table_name = tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Token {
    pub id: uuid::Uuid,
    pub subscription_id: uuid::Uuid,
    pub token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = tokens)]
pub struct NewToken<'a> {
    pub id: &'a uuid::Uuid,
    pub subscription_id: &'a uuid::Uuid,
    pub token: &'a str,
    pub token_type: &'a str,
    pub expires_at: Option<&'a DateTime<Utc>>,
    pub created_at: &'a DateTime<Utc>,
    pub updated_at: &'a DateTime<Utc>,
}

impl TryFrom<Token> for domain::Token {
    type Error = String;

    fn try_from(row: Token) -> Result<Self, Self::Error> {
        Ok(domain::Token {
            id: row.id,
            subscription_id: row.subscription_id,
            value: row.token,
            kind: TokenKind::parse(&row.token_type)?,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}
