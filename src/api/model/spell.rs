use juniper::{graphql_object, ID};
use serde::{Deserialize, Serialize};

use crate::{
    api::{Context, err::{ApiError, ApiResult}},
    remote::{NamedRef, RemoteSpell, SpellSource},
    store::{Filter, Kind, Record},
};


/// A spell. All fields except `id` are optional, as spells from the store might
/// have been created outside of this API and spells from the remote source
/// lack some fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Spell {
    id: String,
    name: Option<String>,
    description: Option<String>,
    higher_level: Option<String>,
    page: Option<String>,
    range: Option<String>,
    components: Option<String>,
    material: Option<String>,
    ritual: Option<String>,
    duration: Option<String>,
    concentration: Option<String>,
    casting_time: Option<String>,
    level: Option<String>,
    school: Option<String>,
    class: Option<String>,
    archetype: Option<String>,
    domains: Option<String>,
    patrons: Option<String>,
    oaths: Option<String>,
}

/// Data for creating a spell via `addSpell`. Every field is required.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewSpell {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) higher_level: String,
    pub(crate) page: String,
    pub(crate) range: String,
    pub(crate) components: String,
    pub(crate) material: String,
    pub(crate) ritual: String,
    pub(crate) duration: String,
    pub(crate) concentration: String,
    pub(crate) casting_time: String,
    pub(crate) level: String,
    pub(crate) school: String,
    pub(crate) class: String,
    pub(crate) archetype: String,
    pub(crate) domains: String,
    pub(crate) patrons: String,
    pub(crate) oaths: String,
}

impl Record for Spell {
    const KIND: Kind = Kind::Spell;
    type New = NewSpell;
}

#[graphql_object(context = Context)]
impl Spell {
    fn id(&self) -> ID {
        ID::from(self.id.clone())
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// What changes when the spell is cast with a higher level spell slot.
    fn higher_level(&self) -> Option<&str> {
        self.higher_level.as_deref()
    }

    /// Where the spell is described, e.g. "phb 259".
    fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    fn range(&self) -> Option<&str> {
        self.range.as_deref()
    }

    /// Required components, e.g. "V, S, M".
    fn components(&self) -> Option<&str> {
        self.components.as_deref()
    }

    fn material(&self) -> Option<&str> {
        self.material.as_deref()
    }

    fn ritual(&self) -> Option<&str> {
        self.ritual.as_deref()
    }

    fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    fn concentration(&self) -> Option<&str> {
        self.concentration.as_deref()
    }

    fn casting_time(&self) -> Option<&str> {
        self.casting_time.as_deref()
    }

    fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    fn school(&self) -> Option<&str> {
        self.school.as_deref()
    }

    /// The classes that can learn this spell, as free text.
    fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    fn archetype(&self) -> Option<&str> {
        self.archetype.as_deref()
    }

    fn domains(&self) -> Option<&str> {
        self.domains.as_deref()
    }

    fn patrons(&self) -> Option<&str> {
        self.patrons.as_deref()
    }

    fn oaths(&self) -> Option<&str> {
        self.oaths.as_deref()
    }
}

impl Spell {
    pub(crate) async fn load_by_id(id: ID, context: &Context) -> ApiResult<Option<Self>> {
        match &context.spells {
            SpellSource::Store => Ok(context.store.load_by_id(&id).await?),
            SpellSource::Remote(client) => client.spell_by_index(&id).await
                .map(|spell| spell.map(Self::from))
                .map_err(ApiError::upstream),
        }
    }

    /// Loads all spells, or only those whose name contains `name` as literal,
    /// case-sensitive substring.
    pub(crate) async fn load_all(name: Option<String>, context: &Context) -> ApiResult<Vec<Self>> {
        match &context.spells {
            SpellSource::Store => {
                let filter = match name {
                    Some(needle) => Filter::Contains { field: "name", needle },
                    None => Filter::All,
                };
                Ok(context.store.load(&filter).await?)
            }
            SpellSource::Remote(client) => client.all_spells(name.as_deref()).await
                .map(|spells| spells.into_iter().map(Self::from).collect())
                .map_err(ApiError::upstream),
        }
    }

    pub(crate) async fn add(spell: NewSpell, context: &Context) -> ApiResult<Self> {
        if let SpellSource::Remote(_) = &context.spells {
            return Err(ApiError::invalid_input(
                "spells-read-only",
                "spells are read-only as they are loaded from a remote API",
            ));
        }

        Ok(context.store.insert::<Self>(&spell).await?)
    }
}

impl From<RemoteSpell> for Spell {
    fn from(src: RemoteSpell) -> Self {
        fn join(parts: Vec<String>, separator: &str) -> Option<String> {
            (!parts.is_empty()).then(|| parts.join(separator))
        }

        fn join_names(refs: Vec<NamedRef>) -> Option<String> {
            join(refs.into_iter().map(|r| r.name).collect(), ", ")
        }

        fn yes_no(flag: bool) -> String {
            if flag { "yes" } else { "no" }.to_owned()
        }

        Self {
            id: src.index,
            name: Some(src.name),
            description: join(src.desc, "\n"),
            higher_level: join(src.higher_level, "\n"),
            page: src.page,
            range: src.range,
            components: join(src.components, ", "),
            material: src.material,
            ritual: src.ritual.map(yes_no),
            duration: src.duration,
            concentration: src.concentration.map(yes_no),
            casting_time: src.casting_time,
            level: src.level.map(|level| level.to_string()),
            school: src.school.map(|school| school.name),
            class: join_names(src.classes),
            archetype: join_names(src.subclasses),
            domains: None,
            patrons: None,
            oaths: None,
        }
    }
}
