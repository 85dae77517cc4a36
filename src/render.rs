use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::model::Colour;

use crate::response::{Card, Payload, Tone};

pub fn colour(tone: Tone) -> Colour {
    match tone {
        Tone::Info => Colour::new(0x3498DB),
        Tone::Success => Colour::new(0x2ECC71),
        Tone::Danger => Colour::new(0xE74C3C),
        Tone::Gift => Colour::new(0x9B59B6),
        Tone::Help => Colour::new(0xF1C40F),
    }
}

pub fn embed(card: &Card) -> CreateEmbed {
    let mut embed = CreateEmbed::new().colour(colour(card.tone));
    if let Some(title) = &card.title {
        embed = embed.title(title);
    }
    if let Some(description) = &card.description {
        embed = embed.description(description);
    }
    for field in &card.fields {
        embed = embed.field(&field.name, &field.value, false);
    }
    if let Some(footer) = &card.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    embed
}

pub fn message(payload: &Payload) -> CreateMessage {
    match payload {
        Payload::Text(text) => CreateMessage::new().content(text),
        Payload::Card(card) => CreateMessage::new().embed(embed(card)),
    }
}
