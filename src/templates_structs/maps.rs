use askama::Template;

use super::Mention;

#[derive(Template)]
#[template(path = "messages/map_prompt.html")]
pub struct MapPromptTemplate {
    pub selector: Mention,
    pub round: u8,
}

#[derive(Template)]
#[template(path = "messages/maps_announced.html")]
pub struct MapsAnnouncedTemplate {
    pub selector: Mention,
    pub first: String,
    pub second: String,
}
