use super::result::Error;
use crate::models::{random_token, NewUser};
use crate::store::Repo;
use djangohashers::make_password;

pub async fn list(repo: &dyn Repo) -> Result<(), Error> {
    let users = repo.users().await?;
    println!(
        "Existing users: {:?}.",
        users.iter().map(|u| &u.username).collect::<Vec<_>>(),
    );
    Ok(())
}

/// Set a new random password for `uname`, creating the user if needed.
pub async fn passwd(
    repo: &dyn Repo,
    uname: &str,
    email: Option<&str>,
) -> Result<(), Error> {
    let pword = random_token(14);
    let hashword = make_password(&pword);
    if repo.set_password(uname, &hashword).await? {
        println!("Updated password for {uname:?} to {pword:?}");
    } else {
        let email = email.ok_or_else(|| {
            Error::Other(format!("No user {uname:?}, give --email to create"))
        })?;
        repo.create_user(NewUser {
            username: uname.into(),
            email: email.into(),
            password: hashword,
        })
        .await?;
        println!("Created user {uname:?} with password {pword:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn passwd_creates_then_updates() {
        let store = MemoryStore::default();
        passwd(&store, "admin", Some("admin@example.com")).await.unwrap();
        let (user, first) =
            store.user_with_password("admin").await.unwrap().unwrap();
        assert_eq!(user.email, "admin@example.com");
        assert!(first.starts_with("pbkdf2_sha256$"));

        passwd(&store, "admin", None).await.unwrap();
        let (_, second) =
            store.user_with_password("admin").await.unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(store.users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_user_needs_email() {
        let store = MemoryStore::default();
        assert!(passwd(&store, "nobody", None).await.is_err());
        assert!(store.users().await.unwrap().is_empty());
    }
}
