use uuid::Uuid;

use crate::{models::{Account, Person}, AppResult};

use super::{parse_id, Store};

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    first_name: String,
    last_name: String,
    profile_image: Option<String>,
    role: String,
    status: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = crate::AppError;

    fn try_from(row: AccountRow) -> AppResult<Account> {
        Ok(Account {
            id: parse_id(&row.id)?,
            first_name: row.first_name,
            last_name: row.last_name,
            profile_image: row.profile_image,
            role: row.role,
            status: row.status.parse()?,
        })
    }
}

impl Store {
    pub async fn insert_account(&self, account: &Account) -> AppResult<()> {
        sqlx::query("INSERT INTO users (id,first_name,last_name,profile_image,role,status) VALUES (?,?,?,?,?,?)")
            .bind(account.id.to_string())
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(&account.profile_image)
            .bind(&account.role)
            .bind(account.status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn account(&self, id: Uuid) -> AppResult<Option<Account>> {
        sqlx::query_as::<_, AccountRow>("SELECT id,first_name,last_name,profile_image,role,status FROM users WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    /// People for the given ids, in the same order. Ids without a directory
    /// entry come back as a placeholder rather than being dropped.
    pub async fn people(&self, ids: &[Uuid]) -> AppResult<Vec<Person>> {
        let mut people = Vec::with_capacity(ids.len());
        for &id in ids {
            people.push(match self.account(id).await? {
                Some(account) => Person::from(&account),
                None => Person::unknown(id),
            });
        }
        Ok(people)
    }
}
