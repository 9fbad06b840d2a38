use actix_web::cookie::{time::Duration, Cookie, SameSite};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

// The refresh cookie is scoped to the refresh route so browsers never attach
// the long-lived credential anywhere else.
const ACCESS_TOKEN_PATH: &str = "/";
const REFRESH_TOKEN_PATH: &str = "/auth/refresh";

pub fn access_token_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(ACCESS_TOKEN_COOKIE, token.to_string())
        .path(ACCESS_TOKEN_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

pub fn refresh_token_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(REFRESH_TOKEN_COOKIE, token.to_string())
        .path(REFRESH_TOKEN_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

/// Expired replacements used on logout.
pub fn clear_access_token_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(ACCESS_TOKEN_COOKIE, "")
        .path(ACCESS_TOKEN_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::ZERO)
        .finish()
}

pub fn clear_refresh_token_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(REFRESH_TOKEN_COOKIE, "")
        .path(REFRESH_TOKEN_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::ZERO)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_is_scoped_to_the_refresh_route() {
        let cookie = refresh_token_cookie("tok", 86_400, true);
        assert_eq!(cookie.path(), Some(REFRESH_TOKEN_PATH));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));
    }

    #[test]
    fn access_cookie_covers_the_whole_site() {
        let cookie = access_token_cookie("tok", 900, false);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(900)));
    }

    #[test]
    fn clearing_zeroes_the_lifetime() {
        let cookie = clear_refresh_token_cookie(true);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
