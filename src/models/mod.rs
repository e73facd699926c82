pub(crate) mod article;
mod category;

pub use article::{
    ApiResponse, Article, ArticleFlag, ArticleId, ArticleQuery, NewArticle, RawArticle, RawSource,
};
pub use category::NewsCategory;
