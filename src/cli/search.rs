use std::sync::Arc;

use tabled::Table;

use crate::{spotify::WebApi, utils, warning};

use super::fail;

pub async fn search(api: Arc<WebApi>, title: String, composer: Option<String>, limit: u32) {
    let query = utils::standard_query(&title, composer.as_deref());

    let tracks = match api.search_tracks(&query, limit).await {
        Ok(tracks) => tracks,
        Err(e) => fail(&e),
    };

    if tracks.is_empty() {
        warning!("No tracks found for \"{}\".", query);
        return;
    }

    let table = Table::new(utils::track_table_rows(&tracks));
    println!("{}", table);
}
