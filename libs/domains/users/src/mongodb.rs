//! MongoDB implementation of UserRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    Collection, Database,
    bson::{Bson, doc, to_bson},
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{Address, Avatar, CartLine, User};
use crate::repository::UserRepository;

pub struct MongoUserRepository {
    users: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: Database) -> Self {
        Self {
            users: db.collection::<User>("users"),
        }
    }

    fn id_filter(id: Uuid) -> mongodb::bson::Document {
        doc! { "_id": to_bson(&id).unwrap_or(Bson::Null) }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: User) -> UserResult<User> {
        self.users.insert_one(&user).await?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let user = self.users.find_one(Self::id_filter(id)).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let user = self.users.find_one(doc! { "email": email }).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> UserResult<Vec<User>> {
        use futures_util::TryStreamExt;

        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self.users.find(doc! {}).with_options(options).await?;
        let users: Vec<User> = cursor.try_collect().await?;

        Ok(users)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update(&self, user: User) -> UserResult<User> {
        let result = self
            .users
            .replace_one(Self::id_filter(user.id), &user)
            .await?;

        if result.matched_count == 0 {
            return Err(UserError::NotFound(user.id));
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn email_exists(&self, email: &str) -> UserResult<bool> {
        let count = self
            .users
            .count_documents(doc! { "email": email })
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self, token))]
    async fn set_refresh_token(&self, id: Uuid, token: Option<String>) -> UserResult<()> {
        let update = match token {
            Some(token) => doc! { "$set": { "refresh_token": token } },
            None => doc! { "$unset": { "refresh_token": "" } },
        };

        let result = self.users.update_one(Self::id_filter(id), update).await?;
        if result.matched_count == 0 {
            return Err(UserError::NotFound(id));
        }

        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn find_by_refresh_token(&self, id: Uuid, token: &str) -> UserResult<Option<User>> {
        let filter = doc! {
            "_id": to_bson(&id).unwrap_or(Bson::Null),
            "refresh_token": token,
        };
        let user = self.users.find_one(filter).await?;
        Ok(user)
    }

    #[instrument(skip(self, token_hash))]
    async fn set_password_reset(
        &self,
        id: Uuid,
        token_hash: String,
        expires: DateTime<Utc>,
    ) -> UserResult<()> {
        let update = doc! {
            "$set": {
                "password_reset_token": token_hash,
                "password_reset_expires": to_bson(&expires).unwrap_or(Bson::Null),
            }
        };

        let result = self.users.update_one(Self::id_filter(id), update).await?;
        if result.matched_count == 0 {
            return Err(UserError::NotFound(id));
        }

        Ok(())
    }

    #[instrument(skip(self, token_hash))]
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> UserResult<Option<User>> {
        let filter = doc! {
            "password_reset_token": token_hash,
            "password_reset_expires": { "$gte": to_bson(&now).unwrap_or(Bson::Null) },
        };
        let user = self.users.find_one(filter).await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_cart(&self, id: Uuid) -> UserResult<Option<Vec<CartLine>>> {
        let user = self.users.find_one(Self::id_filter(id)).await?;
        Ok(user.map(|u| u.carts))
    }

    #[instrument(skip(self))]
    async fn set_cart_line_quantity(
        &self,
        id: Uuid,
        product: Uuid,
        color: &str,
        quantity: i32,
    ) -> UserResult<()> {
        // Positional update on the line matching (product, color)
        let filter = doc! {
            "_id": to_bson(&id).unwrap_or(Bson::Null),
            "carts": {
                "$elemMatch": {
                    "product": to_bson(&product).unwrap_or(Bson::Null),
                    "color": color,
                }
            }
        };
        let update = doc! { "$set": { "carts.$.quantity": quantity } };

        let result = self.users.update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(UserError::NotFound(id));
        }

        Ok(())
    }

    #[instrument(skip(self, line))]
    async fn push_cart_line(&self, id: Uuid, line: CartLine) -> UserResult<()> {
        let update = doc! {
            "$push": { "carts": to_bson(&line).unwrap_or(Bson::Null) }
        };

        let result = self.users.update_one(Self::id_filter(id), update).await?;
        if result.matched_count == 0 {
            return Err(UserError::NotFound(id));
        }

        Ok(())
    }

    #[instrument(skip(self, address))]
    async fn push_address(&self, id: Uuid, address: Address) -> UserResult<()> {
        let update = doc! {
            "$push": { "addresses": to_bson(&address).unwrap_or(Bson::Null) }
        };

        let result = self.users.update_one(Self::id_filter(id), update).await?;
        if result.matched_count == 0 {
            return Err(UserError::NotFound(id));
        }

        Ok(())
    }

    #[instrument(skip(self, avatar))]
    async fn set_avatar(&self, id: Uuid, avatar: Avatar) -> UserResult<()> {
        let update = doc! {
            "$set": { "avatar": to_bson(&avatar).unwrap_or(Bson::Null) }
        };

        let result = self.users.update_one(Self::id_filter(id), update).await?;
        if result.matched_count == 0 {
            return Err(UserError::NotFound(id));
        }

        Ok(())
    }
}
