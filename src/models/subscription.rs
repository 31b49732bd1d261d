use crate::domain::{self, Frequency};
use crate::schema::subscriptions;
use chrono::offset::Utc;
use chrono::DateTime;

#[derive(Queryable, Selectable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: uuid::Uuid,
    pub email: String,
    pub city: String,
    pub frequency: String,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription<'a> {
    pub id: &'a uuid::Uuid,
    pub email: &'a str,
    pub city: &'a str,
    pub frequency: &'a str,
    pub confirmed: bool,
    pub created_at: &'a DateTime<Utc>,
    pub updated_at: &'a DateTime<Utc>,
}

impl TryFrom<Subscription> for domain::Subscription {
    type Error = String;

    fn try_from(row: Subscription) -> Result<Self, Self::Error> {
        Ok(domain::Subscription {
            id: row.id,
            email: row.email,
            city: row.city,
            frequency: Frequency::parse(&row.frequency)?,
            confirmed: row.confirmed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
