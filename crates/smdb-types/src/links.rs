use uuid::Uuid;

use crate::models::User;

const AVATAR_CDN: &str = "https://cdn.discordapp.com";

/// Read-only deep link to a movie, copied to the clipboard by the share action.
pub fn share_link(base_url: &str, movie_id: &Uuid) -> String {
    format!("{}/?movieID={}", base_url.trim_end_matches('/'), movie_id)
}

/// Avatar URL for a user. Users without an uploaded avatar get one of the
/// five default avatars picked by `discriminator % 5`.
pub fn avatar_url(user: &User) -> String {
    match &user.avatar {
        Some(avatar) => format!("{}/avatars/{}/{}", AVATAR_CDN, user.id, avatar),
        None => {
            let index = user.discriminator.parse::<u32>().unwrap_or(0) % 5;
            format!("{}/embed/avatars/{}.png", AVATAR_CDN, index)
        }
    }
}
